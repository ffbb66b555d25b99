use colored::Colorize;

fn main() {
    let command_line_interface = json_schematic::cli::CommandLineInterface::load();
    match command_line_interface.run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red());
            std::process::exit(2);
        }
    }
}
