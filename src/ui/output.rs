use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{}", text.bold().cyan());
}

pub fn success(label: &str) {
    println!("{} {}", "✔".green(), label.green());
}

pub fn warn(label: &str) {
    eprintln!("{} {}", "⚠".yellow(), label.yellow());
}

pub fn info(label: &str, value: &str) {
    println!("{} {}: {}", "ℹ".blue(), label.dimmed(), value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.bold());
}
