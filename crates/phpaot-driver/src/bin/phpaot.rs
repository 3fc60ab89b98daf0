fn main() -> anyhow::Result<()> {
    phpaot_driver::main()
}
