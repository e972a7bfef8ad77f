fn main() {
    if let Err(err) = pyc_compile::driver::run_compiler() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
