#[path = "integration/staging.rs"]
mod staging;
#[path = "integration/demos.rs"]
mod demos;
#[path = "integration/cli.rs"]
mod cli;
