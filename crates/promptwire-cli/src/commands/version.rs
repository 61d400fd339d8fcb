use console::style;

pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "{} - version {}",
        style("promptwire").bold().green(),
        style(version).bold()
    );
}
