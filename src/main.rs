fn main() {
    if let Err(e) = autodj_lib::run() {
        eprintln!("autodj: {}", e);
        std::process::exit(1);
    }
}
