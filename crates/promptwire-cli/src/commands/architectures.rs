use console::style;
use promptwire::architecture::Architecture;
use strum::IntoEnumIterator;

pub fn execute() {
    for architecture in Architecture::iter() {
        let labels = architecture.labels();
        let mut channels = Vec::new();
        if labels.analysis.is_some() {
            channels.push("analysis");
        }
        if labels.commentary.is_some() {
            channels.push("commentary");
        }
        if labels.tool.is_some() {
            channels.push("tool");
        }
        channels.push("final");

        let tools = if architecture.supports_tools() {
            style("tools").green()
        } else {
            style("no tools").dim()
        };
        println!(
            "{:<8} {:<9} channels: {}",
            style(architecture).bold(),
            tools,
            channels.join(", ")
        );
    }
}
