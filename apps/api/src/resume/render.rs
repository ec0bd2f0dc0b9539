use crate::resume::payload::ResumeContent;

/// Renders resume content as a Markdown document: name heading, contact
/// line, summary, then Experience, Education and Skills in stored order.
/// Empty sections are omitted.
pub fn render_resume_markdown(content: &ResumeContent) -> String {
    let personal = &content.personal;
    let mut md = format!("# {}\n\n", personal.name.trim());

    let mut contact = vec![personal.email.trim(), personal.phone.trim()];
    if let Some(address) = personal.address.as_deref() {
        contact.push(address.trim());
    }
    md.push_str(&contact.join(" | "));
    md.push_str("\n\n");

    if let Some(summary) = content.summary.as_deref() {
        md.push_str("## Summary\n\n");
        md.push_str(summary.trim());
        md.push_str("\n\n");
    }

    if !content.experience.is_empty() {
        md.push_str("## Experience\n\n");
        for exp in &content.experience {
            let end = exp.end_date.as_deref().unwrap_or("Present");
            md.push_str(&format!(
                "### {}, {}\n*{} to {}*\n\n",
                exp.title, exp.company, exp.start_date, end
            ));
            if let Some(description) = exp.description.as_deref() {
                md.push_str(description.trim());
                md.push_str("\n\n");
            }
        }
    }

    if !content.education.is_empty() {
        md.push_str("## Education\n\n");
        for edu in &content.education {
            md.push_str(&format!(
                "- **{}**, {} ({})\n",
                edu.degree, edu.school, edu.graduation_date
            ));
        }
        md.push('\n');
    }

    if !content.skills.is_empty() {
        md.push_str("## Skills\n\n");
        md.push_str(&content.skills.join(", "));
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::payload::fixtures::ada;

    #[test]
    fn test_render_full_resume() {
        let md = render_resume_markdown(&ada().content);
        assert!(md.starts_with("# Ada Lovelace\n\nada@example.com | 555-0100\n"));
        assert!(md.contains("### Engineer, Acme\n*2020-01-01 to Present*"));
        assert!(md.contains("- **BSc**, Kings (2015-06-01)"));
        assert!(md.ends_with("## Skills\n\nC++, Mathematics\n"));
        assert!(!md.contains("## Summary"));
    }

    #[test]
    fn test_render_keeps_stored_order() {
        let mut content = ada().content;
        content.skills = vec!["Zeta".into(), "Alpha".into()];
        let md = render_resume_markdown(&content);
        assert!(md.contains("Zeta, Alpha"));
    }

    #[test]
    fn test_render_omits_empty_sections() {
        let mut content = ada().content;
        content.experience.clear();
        content.education.clear();
        content.skills.clear();
        content.summary = Some("Analyst of engines.".into());
        let md = render_resume_markdown(&content);
        assert!(md.contains("## Summary\n\nAnalyst of engines."));
        assert!(!md.contains("## Experience"));
        assert!(!md.contains("## Education"));
        assert!(!md.contains("## Skills"));
    }
}
