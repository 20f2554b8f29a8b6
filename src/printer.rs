use colored::Colorize;

pub const MAIN_ART: &str = r#"
  ____       _      _
 | __ ) _ __(_) ___| | _____
 |  _ \| '__| |/ __| |/ / __|
 | |_) | |  | | (__|   <\__ \
 |____/|_|  |_|\___|_|\_\___/
"#;

pub const SUCCESS_ART: &str = r#"
   _                             _
  | | ___   __ _  __ _  ___  __| |  (_)_ __
  | |/ _ \ / _` |/ _` |/ _ \/ _` |  | | '_ \
  | | (_) | (_| | (_| |  __/ (_| |  | | | | |
  |_|\___/ \__, |\__, |\___|\__,_|  |_|_| |_|
           |___/ |___/
"#;

/// Red `[-]` line for recoverable failures.
pub fn error(message: &str) {
    println!();
    println!("{}", format!("[-] {}", message).red());
    println!();
}

/// Green `[+]` line.
pub fn success(message: &str) {
    println!();
    println!("{}", format!("[+] {}", message).green());
    println!();
}

pub fn info(message: &str) {
    println!();
    println!("{}", format!("[!] {}", message).cyan());
    println!();
}

pub fn warning(message: &str) {
    println!();
    println!("{}", format!("[*] {}", message).yellow());
    println!();
}

pub fn banner() {
    println!("{}", MAIN_ART.cyan());
}
