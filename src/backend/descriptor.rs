use crate::ir::Type;

/// JVM internal name for `name`: the matching import's path with slashes, else the bare name.
pub fn class_path(name: &str, imports: &[String]) -> String {
    imports
        .iter()
        .find(|path| path.rsplit('.').next() == Some(name))
        .map(|path| path.replace('.', "/"))
        .unwrap_or_else(|| name.to_string())
}

pub fn type_descriptor(ty: &Type, imports: &[String]) -> String {
    match ty {
        Type::Int => "I".to_string(),
        Type::Boolean => "Z".to_string(),
        Type::Void => "V".to_string(),
        Type::String => "Ljava/lang/String;".to_string(),
        Type::Array(elem) => format!("[{}", type_descriptor(elem, imports)),
        Type::Class(name) => format!("L{};", class_path(name, imports)),
    }
}

pub fn method_descriptor<'a>(
    params: impl IntoIterator<Item = &'a Type>,
    return_type: &Type,
    imports: &[String],
) -> String {
    let params: String = params
        .into_iter()
        .map(|ty| type_descriptor(ty, imports))
        .collect();
    format!("({}){}", params, type_descriptor(return_type, imports))
}
