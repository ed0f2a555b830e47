fn main() {
    bj_cli::logging::init();
    std::process::exit(bj_cli::run());
}
