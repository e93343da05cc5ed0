//! Sample model used by the CLI demo and the tests
//!
//! `Customer` embeds an `Address`, `Store` lists `Book`s, and `Person`
//! lists other `Person`s. Identities are reachable only through `Storable`.

use chrono::{DateTime, NaiveDate, Utc};

use crate::entity::{Entity, Link, Storable};
use crate::identity::Identity;
use crate::schema::{RegistryBuilder, SchemaBuilder, SchemaRegistry};
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct Address {
    identity: Identity,
    pub street: String,
    pub city: String,
}

impl Address {
    pub fn new(street: &str, city: &str) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
            ..Default::default()
        }
    }
}

impl Storable for Address {
    fn identity(&self) -> &Identity {
        &self.identity
    }
    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Entity for Address {
    const TYPE_NAME: &'static str = "Address";

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .attribute("street", |a| &a.street, |a| &mut a.street)
            .attribute("city", |a| &a.city, |a| &mut a.city);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Customer {
    identity: Identity,
    pub name: String,
    pub age: i32,
    pub vip: bool,
    pub since: NaiveDate,
    pub address: Option<Link<Address>>,
}

impl Customer {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Storable for Customer {
    fn identity(&self) -> &Identity {
        &self.identity
    }
    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Entity for Customer {
    const TYPE_NAME: &'static str = "Customer";

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .attribute("name", |c| &c.name, |c| &mut c.name)
            .attribute("age", |c| &c.age, |c| &mut c.age)
            .attribute("vip", |c| &c.vip, |c| &mut c.vip)
            .attribute("since", |c| &c.since, |c| &mut c.since)
            .attribute("address", |c| &c.address, |c| &mut c.address);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Book {
    identity: Identity,
    pub title: String,
    pub pages: i64,
    pub price: f64,
    pub rating: f32,
}

impl Book {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

impl Storable for Book {
    fn identity(&self) -> &Identity {
        &self.identity
    }
    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Entity for Book {
    const TYPE_NAME: &'static str = "Book";

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .attribute("title", |b| &b.title, |b| &mut b.title)
            .attribute("pages", |b| &b.pages, |b| &mut b.pages)
            .attribute("price", |b| &b.price, |b| &mut b.price)
            .attribute("rating", |b| &b.rating, |b| &mut b.rating);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    identity: Identity,
    pub name: String,
    pub opened: DateTime<Utc>,
    pub books: Vec<Link<Book>>,
}

impl Store {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Storable for Store {
    fn identity(&self) -> &Identity {
        &self.identity
    }
    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Entity for Store {
    const TYPE_NAME: &'static str = "Store";

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .attribute("name", |s| &s.name, |s| &mut s.name)
            .attribute("books", |s| &s.books, |s| &mut s.books)
            .attribute("opened", |s| &s.opened, |s| &mut s.opened);
    }
}

/// Self-referencing list
#[derive(Debug, Clone, Default)]
pub struct Person {
    identity: Identity,
    pub name: String,
    pub friends: Vec<Link<Person>>,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Storable for Person {
    fn identity(&self) -> &Identity {
        &self.identity
    }
    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl Entity for Person {
    const TYPE_NAME: &'static str = "Person";

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .attribute("name", |p| &p.name, |p| &mut p.name)
            .attribute("friends", |p| &p.friends, |p| &mut p.friends);
    }
}

/// Registrations of every sample type
pub fn registry_builder() -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();
    builder
        .register::<Address>()
        .register::<Customer>()
        .register::<Book>()
        .register::<Store>()
        .register::<Person>();
    builder
}

/// Every sample type, validated as one set
pub fn registry() -> Result<SchemaRegistry> {
    registry_builder().build(&[])
}
