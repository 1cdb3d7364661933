fn main() -> std::process::ExitCode {
    cipp_mcp_proxy::run()
}
