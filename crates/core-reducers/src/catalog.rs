//! The built-in pass catalog and its option-gated groups.

use crate::{BalancedPass, BlankPass, CharsPass, LinePass, SanitizePass, TokenPass};
use core_pass::{Pass, PassDescriptor, Registry};
use std::sync::Arc;

/// Which optional groups join the default catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogOptions {
    pub sanitize: bool,
    pub slow: bool,
    pub very_slow: bool,
    /// Skip the catalog entirely; callers append their own passes.
    pub no_defaults: bool,
}

/// Assemble the registry: fixed catalog, then the option-gated groups, in a
/// stable order so equal priorities keep a deterministic tie-break.
pub fn builtin_registry(options: CatalogOptions) -> Registry {
    let mut registry = Registry::new();
    if options.no_defaults {
        return registry;
    }

    let blank: Arc<dyn Pass> = Arc::new(BlankPass);
    let lines: Arc<dyn Pass> = Arc::new(LinePass);
    let balanced: Arc<dyn Pass> = Arc::new(BalancedPass);
    let tokens: Arc<dyn Pass> = Arc::new(TokenPass);
    let chars: Arc<dyn Pass> = Arc::new(CharsPass);

    registry.add(
        PassDescriptor::new("blank", "").first(1).main(100).last(1000),
        blank.clone(),
    );

    // Coarse line windows first, single lines last; the cleanup phase makes
    // one more fine-grained sweep after everything else has settled.
    registry.add(
        PassDescriptor::new("lines", "0").first(20).main(200),
        lines.clone(),
    );
    registry.add(
        PassDescriptor::new("lines", "1").first(21).main(210).last(1010),
        lines.clone(),
    );
    registry.add(
        PassDescriptor::new("lines", "2").first(22).main(220),
        lines.clone(),
    );
    registry.add(
        PassDescriptor::new("lines", "10").first(23).main(230),
        lines.clone(),
    );

    for (arg, pri) in [
        ("curly", 300),
        ("curly-unwrap", 310),
        ("parens", 320),
        ("parens-unwrap", 330),
        ("square", 340),
        ("square-unwrap", 350),
    ] {
        registry.add(PassDescriptor::new("balanced", arg).main(pri), balanced.clone());
    }

    registry.add(PassDescriptor::new("tokens", "2").main(400), tokens.clone());
    registry.add(PassDescriptor::new("tokens", "1").main(410), tokens.clone());
    registry.add(PassDescriptor::new("chars", "1").main(500), chars.clone());

    if options.sanitize {
        let sanitize: Arc<dyn Pass> = Arc::new(SanitizePass);
        registry.add(
            PassDescriptor::new("sanitize", "tabs").first(5).main(110),
            sanitize.clone(),
        );
        registry.add(
            PassDescriptor::new("sanitize", "control").first(6).main(120),
            sanitize.clone(),
        );
        registry.add(
            PassDescriptor::new("sanitize", "spaces").main(130),
            sanitize,
        );
    }

    if options.slow {
        registry.add(PassDescriptor::new("tokens", "3").main(420), tokens.clone());
        registry.add(PassDescriptor::new("tokens", "4").main(430), tokens.clone());
        registry.add(PassDescriptor::new("chars", "2").main(510), chars.clone());
    }

    if options.very_slow {
        registry.add(PassDescriptor::new("tokens", "6").main(440), tokens.clone());
        registry.add(PassDescriptor::new("tokens", "8").main(450), tokens);
        registry.add(PassDescriptor::new("chars", "3").main(520), chars.clone());
        registry.add(PassDescriptor::new("chars", "4").main(530), chars);
    }

    registry
}
