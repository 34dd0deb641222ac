//! LSP command implementation

use lintbridge_lsp::ServerOptions;
use miette::Result;

use crate::utils::create_tokio_runtime;

pub fn run_lsp(options: ServerOptions) -> Result<()> {
    create_tokio_runtime()?.block_on(async {
        lintbridge_lsp::run(options).await;
    });
    Ok(())
}
