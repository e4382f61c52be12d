fn main() {
    if let Err(err) = circuit_graph::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
