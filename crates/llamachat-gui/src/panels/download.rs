use eframe::egui;
use llamachat_services::{
    catalog_entries, format_modified, format_progress, ConnectionConfig, DownloadState, ModelService,
};

#[derive(Default)]
pub struct DownloadWindow {
    open: bool,
    custom_name: String,
}

impl DownloadWindow {
    pub fn open(&mut self, download: &mut DownloadState, service: &mut ModelService, connection: &ConnectionConfig) {
        self.open = true;
        if !download.is_busy() {
            service.refresh_installed(download, connection);
        }
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        download: &mut DownloadState,
        service: &mut ModelService,
        connection: &ConnectionConfig,
    ) {
        if !self.open {
            return;
        }

        let mut open = true;
        egui::Window::new("Download Models")
            .open(&mut open)
            .collapsible(false)
            .default_width(620.0)
            .default_height(520.0)
            .show(ctx, |ui| {
                self.render_connection(ui, download, service, connection);
                ui.separator();
                self.render_catalog(ui, download, service, connection);
                render_installed(ui, download);
                ui.separator();
                self.render_custom(ui, download, service, connection);
                ui.separator();
                render_progress(ui, download, service);
            });

        if !open {
            if download.downloading {
                service.cancel();
            }
            self.open = false;
        }
    }

    fn render_connection(
        &self,
        ui: &mut egui::Ui,
        download: &mut DownloadState,
        service: &mut ModelService,
        connection: &ConnectionConfig,
    ) {
        ui.horizontal(|ui| {
            ui.label(format!("Server: {}", connection.base_url()));

            let idle = !download.is_busy();
            if ui.add_enabled(idle, egui::Button::new("Test Connection")).clicked() {
                service.refresh_installed(download, connection);
            }

            if download.refreshing {
                ui.spinner();
            } else if download.error.is_none() && !download.downloading {
                ui.label(
                    egui::RichText::new(format!("Connected - {} models installed", download.installed.len()))
                        .small()
                        .color(egui::Color32::from_rgb(80, 180, 80)),
                );
            }
        });
    }

    fn render_catalog(
        &self,
        ui: &mut egui::Ui,
        download: &mut DownloadState,
        service: &mut ModelService,
        connection: &ConnectionConfig,
    ) {
        let entries = catalog_entries(&download.installed_names());
        let idle = !download.is_busy();
        let mut requested = None;

        egui::ScrollArea::vertical()
            .max_height(300.0)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("catalog_grid")
                    .num_columns(5)
                    .striped(true)
                    .spacing([12.0, 6.0])
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new("Model").strong());
                        ui.label(egui::RichText::new("Description").strong());
                        ui.label(egui::RichText::new("Size").strong());
                        ui.label(egui::RichText::new("Category").strong());
                        ui.label("");
                        ui.end_row();

                        for entry in &entries {
                            ui.label(egui::RichText::new(&entry.name).monospace());
                            ui.label(&entry.description);
                            ui.label(&entry.size);
                            ui.label(&entry.category);

                            if entry.downloaded {
                                ui.label(egui::RichText::new("Downloaded").color(egui::Color32::from_rgb(80, 180, 80)));
                            } else if ui.add_enabled(idle, egui::Button::new("Download")).clicked() {
                                requested = Some(entry.name.clone());
                            }
                            ui.end_row();
                        }
                    });
            });

        if let Some(name) = requested {
            service.start_pull(download, &name, connection);
        }
    }

    fn render_custom(
        &mut self,
        ui: &mut egui::Ui,
        download: &mut DownloadState,
        service: &mut ModelService,
        connection: &ConnectionConfig,
    ) {
        ui.horizontal(|ui| {
            ui.label("Other model:");
            ui.add(
                egui::TextEdit::singleline(&mut self.custom_name)
                    .hint_text("e.g. llama3.1:8b")
                    .desired_width(220.0),
            );

            let can_pull = !download.is_busy() && !self.custom_name.trim().is_empty();
            if ui.add_enabled(can_pull, egui::Button::new("Download")).clicked() {
                service.start_pull(download, &self.custom_name, connection);
            }
        });
    }
}

fn render_installed(ui: &mut egui::Ui, download: &DownloadState) {
    if download.installed.is_empty() {
        return;
    }

    egui::CollapsingHeader::new("Installed models")
        .default_open(false)
        .show(ui, |ui| {
            egui::ScrollArea::vertical()
                .id_salt("installed_scroll")
                .max_height(160.0)
                .show(ui, |ui| {
                    egui::Grid::new("installed_grid")
                        .num_columns(5)
                        .striped(true)
                        .spacing([12.0, 4.0])
                        .show(ui, |ui| {
                            ui.label(egui::RichText::new("Model").strong());
                            ui.label(egui::RichText::new("Parameters").strong());
                            ui.label(egui::RichText::new("Size").strong());
                            ui.label(egui::RichText::new("Modified").strong());
                            ui.label(egui::RichText::new("Digest").strong());
                            ui.end_row();

                            for model in &download.installed {
                                ui.label(egui::RichText::new(&model.name).monospace());
                                ui.label(model.parameter_size.as_deref().unwrap_or("-"));
                                ui.label(if model.size.is_empty() { "-" } else { model.size.as_str() });
                                ui.label(format_modified(&model.modified));
                                ui.label(egui::RichText::new(model.short_digest()).monospace().small());
                                ui.end_row();
                            }
                        });
                });
        });
}

fn render_progress(ui: &mut egui::Ui, download: &DownloadState, service: &mut ModelService) {
    if let Some(error) = &download.error {
        ui.colored_label(egui::Color32::RED, error);
    }

    if !download.downloading && download.status.is_empty() {
        return;
    }

    let text = format_progress(download.percentage, &download.status);
    let bar = match download.percentage {
        Some(pct) => egui::ProgressBar::new(f32::from(pct) / 100.0).text(text),
        None => egui::ProgressBar::new(0.0).animate(download.downloading).text(text),
    };

    ui.horizontal(|ui| {
        ui.add(bar.desired_width(ui.available_width() - 80.0));
        if download.downloading && ui.button("Cancel").clicked() {
            service.cancel();
        }
    });
}
