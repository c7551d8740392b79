fn main() {
    if let Err(err) = recital_lib::run() {
        eprintln!("recital: {err:#}");
        std::process::exit(1);
    }
}
