use std::path::{Component, Path};

use super::FieldExtractor;
use super::date::year_segment;
use crate::model::SourceDocument;
use crate::util::collapse_whitespace;

impl FieldExtractor {
    /// Reads what the records tree encodes in a file's location:
    /// `<root>/<year>/<specialty>/<NN_Month D YYYY - Provider>/<file>`.
    /// Every part of the convention is optional.
    pub fn describe_source(&self, data_root: &Path, path: &Path) -> SourceDocument {
        let relative_path = path.strip_prefix(data_root).unwrap_or(path).to_path_buf();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let directories: Vec<String> = relative_path
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let year_position = directories
            .iter()
            .rposition(|segment| year_segment(segment).is_some());
        let year = year_position.and_then(|index| year_segment(&directories[index]));

        let visit_position = directories
            .iter()
            .rposition(|segment| self.visit_folder.is_match(segment));
        let (visit_date, visit_provider) = match visit_position {
            Some(index) => self.parse_visit_folder(&directories[index], year),
            None => (None, None),
        };

        let specialty = year_position
            .map(|index| index + 1)
            .filter(|index| Some(*index) != visit_position)
            .and_then(|index| directories.get(index))
            .map(|segment| collapse_whitespace(segment))
            .filter(|segment| !segment.is_empty());

        let parent_dir_name = path
            .parent()
            .and_then(|parent| parent.file_name())
            .map(|name| name.to_string_lossy().into_owned());

        SourceDocument {
            path: path.to_path_buf(),
            relative_path,
            file_name,
            year,
            specialty,
            visit_folder: visit_position.map(|index| directories[index].clone()),
            visit_date,
            visit_provider,
            parent_dir_name,
            text: String::new(),
        }
    }

    fn parse_visit_folder(
        &self,
        folder: &str,
        year: Option<i32>,
    ) -> (Option<chrono::NaiveDate>, Option<String>) {
        let Some(captures) = self.visit_folder.captures(folder) else {
            return (None, None);
        };

        let date = captures
            .get(1)
            .and_then(|part| self.name_date(part.as_str(), year));
        let provider = captures
            .get(2)
            .map(|part| normalize_provider_name(part.as_str()))
            .filter(|name| !name.is_empty());

        (date, provider)
    }
}

/// "Dr Gagneet" and "dr. gagneet" both become "Dr. Gagneet".
pub(super) fn normalize_provider_name(raw: &str) -> String {
    let name = collapse_whitespace(raw);
    let lowered = name.to_ascii_lowercase();
    for prefix in ["dr. ", "dr "] {
        if lowered.starts_with(prefix) {
            return format!("Dr. {}", name[prefix.len()..].trim());
        }
    }
    name
}
