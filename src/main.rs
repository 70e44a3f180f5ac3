fn main() -> anyhow::Result<()> {
    viewscript_rust::run()
}
