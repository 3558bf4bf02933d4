//! Entry point for the gateway binary.
#![forbid(unsafe_code)]

#[expect(
    clippy::print_stderr,
    reason = "the binary reports fatal errors on stderr before exiting"
)]
fn main() {
    if let Err(err) = poi_gateway_server::run() {
        eprintln!("poi-gateway: {err}");
        std::process::exit(1);
    }
}
