/// Collapse path segments that look like resource names into a fixed placeholder so that
/// per-request metrics don't explode into one series per object name.
///
/// Kubernetes API paths have a small, well-known shape:
/// `/api/v1/namespaces/{ns}/{kind}/{name}[/subresource]` or
/// `/apis/{group}/{version}/namespaces/{ns}/{kind}/{name}[/subresource]`. Everything after
/// `namespaces/<ns>/<kind>/` and after a bare `<kind>/` at the cluster-scoped level is a name,
/// not a template.
pub fn template_path(path: &str, placeholder: Option<&str>) -> String {
    let placeholder = placeholder.unwrap_or(":name");
    let segments: Vec<&str> = path.split('/').collect();

    let mut out = Vec::with_capacity(segments.len());
    let mut prev_two: (&str, &str) = ("", "");
    for (i, seg) in segments.iter().enumerate() {
        if i == 0 || seg.is_empty() {
            out.push(*seg);
            continue;
        }
        let is_name_position = prev_two.0 == "namespaces" && i >= 2
            || (prev_two.1 != "namespaces" && prev_two.1 != "api" && prev_two.1 != "apis" && is_resource_name_slot(&segments, i));
        if is_name_position {
            out.push(placeholder);
        } else {
            out.push(*seg);
        }
        prev_two = (prev_two.1, *seg);
    }
    out.join("/")
}

fn is_resource_name_slot(segments: &[&str], i: usize) -> bool {
    // A name follows a known plural-kind segment that itself follows a version segment.
    i >= 3 && segments[i - 2] != "namespaces"
}
