fn main() -> anyhow::Result<()> {
    xcrome::run()
}
