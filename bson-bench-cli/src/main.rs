fn main() {
    if let Err(e) = bson_bench_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
