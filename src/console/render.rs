//! Terminal output for the chat console.

use colored::Colorize;

pub fn banner(model: Option<&str>, mcp_url: &str) {
    println!("{}", "deepspec".bold().cyan());
    match model {
        Some(model) => println!("  model: {}", model.dimmed()),
        None => println!("  model: {}", "unavailable".dimmed()),
    }
    println!("  mcp:   {}", mcp_url.dimmed());
    println!("{}", "Type '/?' for help.".dimmed());
    println!();
}

pub fn help() {
    println!("{}", "Commands:".bold());
    println!("  /?          show this help");
    println!("  /reconnect  re-run the MCP handshake");
    println!("  /quit       exit (Ctrl-C also works)");
}

pub fn user_line(text: &str) {
    println!("{} {}", ">".bold().blue(), text);
}

pub fn thinking() {
    println!("{}", "thinking…".dimmed().italic());
}

pub fn response(text: &str) {
    println!("{}", text);
    println!();
}

pub fn error(message: &str) {
    println!("{}", message.red());
}

pub fn info(message: &str) {
    println!("{}", message.dimmed());
}

pub fn status(healthy: bool) {
    if healthy {
        println!("{} {}", "●".green(), "MCP online".green());
    } else {
        println!("{} {}", "●".red(), "MCP offline".red());
    }
}
