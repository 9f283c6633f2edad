fn main() -> anyhow::Result<()> {
    flatnotes::cli::run()
}
