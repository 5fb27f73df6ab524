mod cli;
mod config;
mod http_server;
mod signals;

fn main() {
    cli::exec();
}
