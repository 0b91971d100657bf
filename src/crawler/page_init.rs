//! Deterministic page environment for script-executing engines
//!
//! Client-rendered pages often embed timestamps or random ids. Seeding these
//! sources makes repeated renders of the same page byte-identical, which the
//! duplicate detector depends on.

/// Script run before any page script in a browser engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageInitScript {
    pub random_seed: u64,
    pub clock_start: u64,
    pub performance_start: u64,
}

impl PageInitScript {
    /// Renders the JavaScript prelude
    ///
    /// `Math.random` becomes a sine-based sequence, `Date.now` and
    /// `performance.now` become counters.
    pub fn render(&self) -> String {
        format!(
            r#"(() => {{
  let randomSeed = {random};
  Math.random = () => {{
    const x = Math.sin(randomSeed++) * 10000;
    return x - Math.floor(x);
  }};
  let nowSeed = {clock};
  Date.now = () => nowSeed++;
  let performanceSeed = {perf};
  performance.now = () => performanceSeed++;
}})();"#,
            random = self.random_seed,
            clock = self.clock_start,
            perf = self.performance_start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script_overrides_sources() {
        let script = PageInitScript::default().render();
        assert!(script.contains("Math.random = () =>"));
        assert!(script.contains("Math.sin(randomSeed++)"));
        assert!(script.contains("Date.now = () => nowSeed++"));
        assert!(script.contains("performance.now = () => performanceSeed++"));
        assert!(script.contains("let randomSeed = 0;"));
    }

    #[test]
    fn test_render_is_stable() {
        let script = PageInitScript {
            random_seed: 7,
            clock_start: 1000,
            performance_start: 5,
        };
        assert_eq!(script.render(), script.render());
        assert!(script.render().contains("let nowSeed = 1000;"));
    }
}
