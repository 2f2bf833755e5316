//! gg binary entry point.

use ggsync::ui::output;

fn main() {
    if let Err(err) = ggsync::cli::run() {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
