//! hy2build CLI - builds libHysteria2 artifacts for every platform

fn main() {
    if let Err(e) = hy2build::run() {
        eprintln!("error: {:#}", e);
        if hy2build::is_usage_error(&e) {
            eprintln!();
            eprintln!("{}", hy2build::USAGE);
        }
        std::process::exit(1);
    }
}
