use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

const DEFAULT_FILTER: &str = "warn,clonevox=info";

pub fn init_logger() {
    // Установка базового фильтра и переопределение через переменные окружения
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);

    let mut builder = Builder::from_env(env);

    // Явно подавляем логи от HTTP-стека, который использует клиент перезапуска
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("symphonia", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    // Повторная инициализация (например, из тестов) не должна паниковать
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
