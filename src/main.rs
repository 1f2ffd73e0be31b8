fn main() {
    match parcelscan::cli::run() {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            parcelscan::ui::eprintln_error(&err);
            std::process::exit(parcelscan::exit::exit_code(&err));
        }
    }
}
