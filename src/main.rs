mod capture;
mod chatgpt;
mod cli;
mod commands;
mod config;
mod dom;
mod env_loader;
mod error;
mod fields;
mod ids;
mod net;
mod normalize;
mod page;
mod project;
mod record;
mod render;
mod share;
mod snapshot;
mod trace;
mod urls;

fn main() {
    env_loader::load_dotenv();

    if let Err(err) = cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
