//! Symbol resolution boundary.
//!
//! Resolution against symbol servers happens outside this crate; adapters
//! only decide whether a lookup is allowed and delegate to a resolver.

use crate::utils::error::SymbolError;
use std::collections::HashMap;
use std::io::Write;

/// Symbols produced for one module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSymbols {
    pub module: String,
    /// Address to symbol name
    pub symbols: HashMap<u64, String>,
}

/// Resolves a module's symbols for a process
pub trait SymbolResolver {
    fn resolve(
        &self,
        module: &str,
        process_id: Option<u32>,
        log: &mut dyn Write,
    ) -> Result<ResolvedSymbols, SymbolError>;
}

/// Resolver that always reports symbols as unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolResolver for NoSymbols {
    fn resolve(
        &self,
        module: &str,
        _process_id: Option<u32>,
        log: &mut dyn Write,
    ) -> Result<ResolvedSymbols, SymbolError> {
        let _ = writeln!(log, "No symbol source configured for {}", module);
        Err(SymbolError::SymbolsUnavailable {
            module: module.to_string(),
        })
    }
}
