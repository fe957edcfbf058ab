fn main() -> anyhow::Result<()> {
    janus_driver::main()
}
