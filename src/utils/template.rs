/// Manifest and values templating
use handlebars::Handlebars;
use serde::Serialize;

use crate::error::Result;

/// Render a YAML template with `data`.
///
/// HTML escaping is disabled and strict mode is on, so a missing variable is
/// an error instead of an empty string in the rendered manifest.
pub fn render<T: Serialize>(template: &str, data: &T) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);
    Ok(handlebars.render_template(template, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn test_render_without_escaping() {
        let out = render(
            "rolearn: {{arn}}\nusername: system:node:{{user}}\n",
            &json!({ "arn": "arn:aws:iam::1:role/node", "user": "{{EC2PrivateDNSName}}" }),
        )
        .unwrap();

        assert_eq!(
            out,
            "rolearn: arn:aws:iam::1:role/node\nusername: system:node:{{EC2PrivateDNSName}}\n"
        );
    }

    #[test]
    fn test_missing_variable_is_error() {
        let err = render("name: {{name}}", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
