#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a [`Rule`](crate::Rule), returning `Result<Rule, RuleError>`.
///
/// ```
/// use translit::rule;
///
/// let r = rule!(ante: "x", key: "ab", post: 'c', output: "yz", cursor: 1).unwrap();
/// assert_eq!(r.to_string(), "x { ab } c > y|z ;");
/// ```
#[macro_export]
macro_rules! rule {
    (
        $(ante: $ante:expr,)?
        key: $key:expr
        $(, post: $post:expr)?
        , output: $output:expr
        $(, cursor: $cursor:expr)?
        $(, anchor_start: $anchor_start:literal)?
        $(, anchor_end: $anchor_end:literal)?
        $(,)?
    ) => {{
        #[allow(unused_mut)]
        let mut builder = $crate::Rule::builder()
            $(.ante($ante))?
            .key($key)
            $(.post($post))?
            .output($output)
            $(.cursor($cursor))?;
        $(if $anchor_start { builder = builder.anchor_start(); })?
        $(if $anchor_end { builder = builder.anchor_end(); })?
        builder.build()
    }};
}
