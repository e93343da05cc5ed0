//! Sample scenarios run by `persistkit demo`

use chrono::{NaiveDate, Utc};
use persistkit::sample::{Address, Book, Customer, Store};
use persistkit::{ErrorKind, Link, Persistence, Storable, ui};

pub fn run(ctx: &Persistence) -> anyhow::Result<()> {
    ui::header("Persistkit demo");

    ui::section("Embedded reference");
    let mut address = Address::new("221B Baker Street", "London");
    let mut customer = Customer::named("Ada");
    customer.age = 36;
    customer.vip = true;
    customer.since = NaiveDate::from_ymd_opt(2021, 11, 7).unwrap_or_default();
    customer.address = Some(Link::to(&address));

    match ctx.add(&mut customer) {
        Err(err) if err.kind() == ErrorKind::UnpersistedDependency => {
            ui::warn(&format!("Customer before address refused: {}", err.message()));
        }
        other => other?,
    }
    ctx.add(&mut address)?;
    ctx.add(&mut customer)?;
    ui::success(&format!("Stored customer {}", customer.identity().uuid()));

    let found = ctx
        .find_by_identity::<Customer>(customer.identity().uuid())?
        .ok_or_else(|| anyhow::anyhow!("customer vanished"))?;
    ui::info("Name", &found.name);
    ui::info("Since", &found.since.to_string());
    if let Some(mut link) = found.address {
        ui::info("Address (stored)", &format!("unresolved {}", link.uuid()));
        ctx.resolve(&mut link)?;
        if let Some(address) = link.get() {
            ui::info("Address (resolved)", &format!("{}, {}", address.street, address.city));
        }
    }

    match ctx.remove(&mut address) {
        Err(err) if err.kind() == ErrorKind::ReferencedObject => {
            ui::warn(&format!("Address removal refused: {}", err.message()));
        }
        other => other?,
    }

    ui::section("List reference");
    let mut books = Vec::new();
    for title in ["Dune", "Emma", "Ulysses", "Beloved"] {
        let mut book = Book::titled(title);
        ctx.add(&mut book)?;
        books.push(book);
    }

    let mut store = Store::named("Corner Books");
    store.opened = Utc::now();
    store.books = books[..3].iter().map(Link::to).collect();
    ctx.add(&mut store)?;
    ui::success(&format!("Stored store with {} books", store.books.len()));

    store.books = books[1..].iter().map(Link::to).collect();
    ctx.update(&mut store)?;
    ui::success(&format!("Reconciled books, usn {}", store.identity().usn()));

    for stored in ctx.find_all::<Store>()? {
        let mut links = stored.books.clone();
        ctx.resolve_all(&mut links)?;
        let titles: Vec<&str> = links
            .iter()
            .filter_map(|l| l.get())
            .map(|b| b.title.as_str())
            .collect();
        ui::info(&stored.name, &titles.join(", "));
    }

    ui::section("Tables");
    Ok(())
}
