use chrono::Local;
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let expression = args[1..].join(" ");
    match querytime::parse(&expression, Local::now()) {
        Ok(datetime) => println!("{} ({})", datetime, datetime.timestamp()),
        Err(e) => println!("{}", e),
    }
    Ok(())
}
