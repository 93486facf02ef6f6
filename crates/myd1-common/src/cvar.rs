// cvar.rs — named tunables with string and float views
//
// Owned by the game context; there is no global instance.

use crate::common::{com_dprintf, com_printf};

use std::collections::HashMap;

pub const CVAR_ARCHIVE: i32 = 1; // written by write_variables
pub const CVAR_NOSET: i32 = 8; // only force_set may change it

/// Portal-chain depth limit for the visibility solver.
pub const CVAR_VIS_MAX_DEPTH: &str = "vis_max_depth";
/// Lighting-neighbour distance threshold.
pub const CVAR_VIS_DISTANCE: &str = "vis_distance";
/// Swept-movement iterations per item per frame.
pub const CVAR_PHYS_MAX_BOUNCES: &str = "phys_max_bounces";
pub const CVAR_DEVELOPER: &str = "developer";

#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

#[derive(Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the engine's cvars registered at their defaults.
    pub fn with_engine_defaults() -> Self {
        let mut ctx = Self::new();
        ctx.get(CVAR_VIS_DISTANCE, Some("80"), CVAR_ARCHIVE);
        ctx.get(CVAR_VIS_MAX_DEPTH, Some("25"), CVAR_ARCHIVE);
        ctx.get(CVAR_PHYS_MAX_BOUNCES, Some("3"), 0);
        ctx.get(CVAR_DEVELOPER, Some("0"), 0);
        ctx
    }

    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    /// "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    /// Get or create a cvar. An existing cvar keeps its value but gains
    /// `flags`.
    pub fn get(&mut self, name: &str, value: Option<&str>, flags: i32) -> Option<usize> {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return Some(idx);
        }

        let value = value?;
        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            modified: true,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        Some(idx)
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> Option<usize> {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, Some(value), 0),
        };

        if !force && self.cvar_vars[idx].flags & CVAR_NOSET != 0 {
            com_printf(&format!("{} is write protected.\n", name));
            return Some(idx);
        }

        let var = &mut self.cvar_vars[idx];
        if var.string == value {
            return Some(idx);
        }
        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
        Some(idx)
    }

    /// Respects CVAR_NOSET.
    pub fn set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, false)
    }

    pub fn force_set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, true)
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Names of cvars changed since the last call; clears their flags.
    pub fn take_modified(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        for var in &mut self.cvar_vars {
            if var.modified {
                var.modified = false;
                names.push(var.name.clone());
            }
        }
        names
    }

    /// Write archived cvars as `set name "value"` lines.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags & CVAR_ARCHIVE != 0 {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }

    /// Apply `set name "value"` lines. Blank lines and `//` comments are
    /// skipped; anything else is reported and ignored. Returns the number of
    /// cvars set.
    pub fn exec_config(&mut self, text: &str) -> usize {
        let mut count = 0;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            match parse_set_line(line) {
                Some((name, value)) => {
                    self.set(name, value);
                    count += 1;
                }
                None => com_dprintf(&format!("config line {}: can't parse \"{}\"\n", lineno + 1, line)),
            }
        }
        count
    }
}

fn parse_set_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("set")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (name, value) = rest.split_once(char::is_whitespace)?;
    let value = value.trim();
    let value = match value.strip_prefix('"') {
        Some(v) => v.strip_suffix('"')?,
        None => value,
    };
    Some((name, value))
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let ctx = CvarContext::with_engine_defaults();
        assert_eq!(ctx.variable_value(CVAR_VIS_DISTANCE), 80.0);
        assert_eq!(ctx.variable_value(CVAR_VIS_MAX_DEPTH), 25.0);
        assert_eq!(ctx.variable_value(CVAR_PHYS_MAX_BOUNCES), 3.0);
        assert_eq!(ctx.variable_value(CVAR_DEVELOPER), 0.0);
    }

    #[test]
    fn test_cvar_set_and_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("a", Some("10"), 0);
        ctx.set("a", "20");
        assert_eq!(ctx.variable_value("a"), 20.0);

        ctx.get("b", Some("10"), CVAR_NOSET);
        ctx.set("b", "20");
        assert_eq!(ctx.variable_value("b"), 10.0);
        ctx.force_set("b", "20");
        assert_eq!(ctx.variable_value("b"), 20.0);
    }

    #[test]
    fn test_cvar_get_creates_once() {
        let mut ctx = CvarContext::new();
        ctx.get("test", Some("1"), 0);
        ctx.get("test", Some("2"), 0);
        assert_eq!(ctx.variable_string("test"), "1");
        assert_eq!(ctx.variable_string("missing"), "");
    }

    #[test]
    fn test_set_value_formats_integers() {
        let mut ctx = CvarContext::new();
        ctx.set_value("n", 3.0);
        assert_eq!(ctx.variable_string("n"), "3");
        ctx.set_value("n", 2.5);
        assert_eq!(ctx.variable_string("n"), "2.5");
    }

    #[test]
    fn test_take_modified() {
        let mut ctx = CvarContext::with_engine_defaults();
        assert_eq!(ctx.take_modified().len(), 4);
        assert!(ctx.take_modified().is_empty());
        ctx.set(CVAR_DEVELOPER, "1");
        assert_eq!(ctx.take_modified(), vec![CVAR_DEVELOPER.to_string()]);
    }

    #[test]
    fn test_write_then_exec_config() {
        let mut ctx = CvarContext::with_engine_defaults();
        ctx.set(CVAR_VIS_DISTANCE, "120");
        let mut buf = Vec::new();
        ctx.write_variables(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("set vis_distance \"120\""));
        assert!(!text.contains("developer"));

        let mut fresh = CvarContext::with_engine_defaults();
        let n = fresh.exec_config(&format!("// saved\n\n{}garbage line\n", text));
        assert_eq!(n, 2);
        assert_eq!(fresh.variable_value(CVAR_VIS_DISTANCE), 120.0);
    }

    #[test]
    fn test_parse_set_line() {
        assert_eq!(parse_set_line("set a \"b c\""), Some(("a", "b c")));
        assert_eq!(parse_set_line("set a 5"), Some(("a", "5")));
        assert_eq!(parse_set_line("setx a 5"), None);
        assert_eq!(parse_set_line("set a \"open"), None);
    }
}
