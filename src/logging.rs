use log::LevelFilter;
use std::io::Write;

pub fn init_logger(name: impl Into<String>) {
    let crate_name = name.into().replace('-', "_");

    env_logger::builder()
        .filter(Some(crate_name.as_str()), LevelFilter::Info)
        .parse_default_env()
        .format(move |f, rec| {
            let now = humantime::format_rfc3339_millis(std::time::SystemTime::now());
            let module = rec.module_path().unwrap_or("<unknown>");
            let line = rec.line().unwrap_or(u32::MIN);

            writeln!(
                f,
                "[{} {} {}:{}] {}",
                rec.level(),
                now,
                module,
                line,
                rec.args()
            )
        })
        .init();
}
