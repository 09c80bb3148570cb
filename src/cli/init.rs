use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{save_settings, settings_file_exists, shellexpand_path, Settings};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = Settings::default();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }

    std::fs::create_dir_all(&settings.data_dir)?;

    let already_configured = settings_file_exists();
    save_settings(&settings)?;

    let conn = get_connection(&std::path::Path::new(&settings.data_dir).join("flowbook.db"))?;
    init_db(&conn)?;

    if already_configured {
        println!("Reinitialized Flowbook at {}", settings.data_dir);
    } else {
        println!("Initialized Flowbook at {}", settings.data_dir);
    }
    println!("Next: `flowbook import file <statement.xlsx>` to bring in your first statement.");
    Ok(())
}
