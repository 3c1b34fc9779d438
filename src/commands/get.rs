use anyhow::bail;

use crate::controllers::paste;
use crate::App;

pub async fn run(app: App, id: &str) -> anyhow::Result<()> {
    match paste::fetch(&app, id).await {
        Ok(paste) => {
            println!("{}", serde_json::to_string_pretty(&paste)?);
            Ok(())
        }
        Err(e) => bail!("{kind}: {e}", kind = e.kind()),
    }
}
