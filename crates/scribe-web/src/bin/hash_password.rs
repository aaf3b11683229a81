use std::io::{self, Write};
use std::process::ExitCode;

use scribe_core::auth::password::hash_password;

/// Prints an argon2 digest for `admin.password_hash` in the server config.
fn main() -> ExitCode {
    eprint!("Enter password: ");
    let _ = io::stderr().flush();

    let mut password = String::new();
    if let Err(e) = io::stdin().read_line(&mut password) {
        eprintln!("Failed to read password: {e}");
        return ExitCode::FAILURE;
    }
    let password = password.trim();

    if password.is_empty() {
        eprintln!("Password cannot be empty");
        return ExitCode::FAILURE;
    }

    match hash_password(password) {
        Ok(hash) => {
            println!("{hash}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to hash password: {e}");
            ExitCode::FAILURE
        }
    }
}
