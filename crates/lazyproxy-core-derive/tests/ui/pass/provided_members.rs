use lazyproxy_core::{lazy_contract, CoreError};

#[derive(Debug)]
pub struct AppError(String);

impl From<CoreError> for AppError {
    fn from(error: CoreError) -> Self {
        AppError(error.to_string())
    }
}

#[lazy_contract]
pub trait Reporter {
    fn report(&self, line: &str) -> Result<usize, AppError>;

    fn report_all<I: IntoIterator<Item = String>>(&self, lines: I) -> Result<usize, AppError> {
        let mut total = 0;
        for line in lines {
            total += self.report(&line)?;
        }
        Ok(total)
    }

    fn kind() -> &'static str {
        "reporter"
    }

    fn report_debug(&self, value: &impl std::fmt::Debug) -> Result<usize, AppError> {
        self.report(&format!("{:?}", value))
    }
}

fn main() {}
