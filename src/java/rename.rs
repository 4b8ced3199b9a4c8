//! Best-effort textual class renaming.
//!
//! This is a regex rewrite, not a parse. It renames the public type
//! declaration, constructors, `new` expressions, static member access,
//! casts and declarations whose type is the class. Identifiers that merely
//! contain the old name in one of those positions can be renamed too.

use regex::{Captures, Regex};

use crate::error::Result;

/// Rename `old` to `new` everywhere it is recognizably the class name.
pub fn rename_class(code: &str, old: &str, new: &str) -> Result<String> {
    let old_escaped = regex::escape(old);

    let declaration = Regex::new(&format!(
        r"\bpublic\s+(class|interface|enum)\s+{}\b",
        old_escaped
    ))?;
    let code = declaration.replacen(code, 1, |caps: &Captures| {
        format!("public {} {}", &caps[1], new)
    });

    let constructor = Regex::new(&format!(r"\b{}\s*\(", old_escaped))?;
    let code = constructor.replace_all(&code, |_: &Captures| format!("{}(", new));

    let usages = [
        format!(r"\bnew\s+{}\b", old_escaped),
        format!(r"\b{}\s*\.", old_escaped),
        format!(r"\({}\)", old_escaped),
        format!(r"\b{}\s+\w", old_escaped),
    ];

    let mut code = code.into_owned();
    for pattern in &usages {
        code = Regex::new(pattern)?
            .replace_all(&code, |caps: &Captures| caps[0].replace(old, new))
            .into_owned();
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_declaration_constructor_and_usages() {
        let code = r#"public class Foo {
    private static Foo INSTANCE = new Foo();
    public Foo() {}
    public Foo (int x) {}
    static Foo of(Object o) { return (Foo) o; }
    int size() { return Foo.count; }
}"#;
        let renamed = rename_class(code, "Foo", "Foo_2").unwrap();
        assert_eq!(
            renamed,
            r#"public class Foo_2 {
    private static Foo_2 INSTANCE = new Foo_2();
    public Foo_2() {}
    public Foo_2(int x) {}
    static Foo_2 of(Object o) { return (Foo_2) o; }
    int size() { return Foo_2.count; }
}"#
        );
    }

    #[test]
    fn leaves_longer_identifiers_alone() {
        let code = "public class Foo {\n    FooBar helper = new FooBar();\n}";
        let renamed = rename_class(code, "Foo", "Foo_3").unwrap();
        assert!(renamed.starts_with("public class Foo_3 {"));
        assert!(renamed.contains("FooBar helper = new FooBar();"));
    }

    #[test]
    fn only_first_declaration_is_renamed() {
        let code = "public class Foo {}\npublic class Foo {}";
        let renamed = rename_class(code, "Foo", "Foo_2").unwrap();
        assert_eq!(renamed, "public class Foo_2 {}\npublic class Foo {}");
    }

    #[test]
    fn heuristic_can_overmatch_method_named_like_class() {
        // A method call sharing the class name looks like a constructor.
        let code = "public class Foo {\n    void run() { other.Foo(); }\n}";
        let renamed = rename_class(code, "Foo", "Foo_2").unwrap();
        assert!(renamed.contains("other.Foo_2();"));
    }
}
