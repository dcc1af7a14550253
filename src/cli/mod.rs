mod add;
mod compare;
mod delete;
mod label;
mod list;
mod recognize;
mod replay;
pub mod server;

pub use add::*;
pub use compare::*;
pub use delete::*;
pub use label::*;
pub use list::*;
pub use recognize::*;
pub use replay::*;
pub use server::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
