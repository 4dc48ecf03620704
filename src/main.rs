fn main() -> anyhow::Result<()> {
    smart_companion_lib::run()
}
