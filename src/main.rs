use anyhow::Result;

fn main() -> Result<()> {
    sheetfold::run()
}
