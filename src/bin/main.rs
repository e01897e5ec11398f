use mio::Poll;
use webserv::error::Result;
use webserv::server::Server;

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "conf/default.conf".to_string());
    let content = std::fs::read_to_string(&path)?;
    let config = config_lang::load(&content)?;

    println!("{config}");

    let poll = Poll::new()?;
    let server = Server::new(config, &poll)?;
    server.run(poll)
}
