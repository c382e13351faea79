pub const GUIDE: &str = include_str!("../data/prompts/guide.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// Curator prompt for one city.
pub fn guide_prompt(city: &str) -> String {
    render(GUIDE, &[("city", city.trim())])
}
