use eframe::egui;
use llamachat_services::{format_timestamp, AppConfig, ChatService, ChatSession, Message, Role};

const INPUT_ID: &str = "chat_input";

#[derive(Default)]
pub struct ChatPanel {
    input: String,
}

impl ChatPanel {
    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        session: &mut ChatSession,
        chat: &mut ChatService,
        model: &str,
        config: &AppConfig,
    ) {
        let input_height = 90.0;
        let transcript_height = (ui.available_height() - input_height).max(100.0);

        egui::ScrollArea::vertical()
            .max_height(transcript_height)
            .auto_shrink([false, false])
            .stick_to_bottom(config.ui.auto_scroll)
            .show(ui, |ui| {
                self.render_transcript(ui, session, config);
            });

        ui.separator();
        self.render_input(ui, session, chat, model, config);
    }

    fn render_transcript(&self, ui: &mut egui::Ui, session: &ChatSession, config: &AppConfig) {
        let show_timestamps = config.ui.show_timestamps;

        if session.transcript.is_empty() && session.transcript.pending().is_none() {
            ui.add_space(20.0);
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new("Select a model and start chatting").weak());
            });
            return;
        }

        for message in session.transcript.messages() {
            render_bubble(ui, message, show_timestamps, false);
            ui.add_space(6.0);
        }

        if let Some(pending) = session.transcript.pending() {
            render_bubble(ui, pending, show_timestamps, true);
        }

        if let Some(error) = &session.error {
            ui.add_space(6.0);
            ui.colored_label(egui::Color32::from_rgb(220, 80, 80), format!("Error: {error}"));
        }
    }

    fn render_input(
        &mut self,
        ui: &mut egui::Ui,
        session: &mut ChatSession,
        chat: &mut ChatService,
        model: &str,
        config: &AppConfig,
    ) {
        let id = egui::Id::new(INPUT_ID);

        // Enter sends, Shift+Enter falls through to the editor as a newline
        let enter = ui.memory(|m| m.has_focus(id))
            && ui.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter));

        ui.horizontal(|ui| {
            let button_width = 80.0;
            ui.add(
                egui::TextEdit::multiline(&mut self.input)
                    .id(id)
                    .desired_rows(3)
                    .desired_width(ui.available_width() - button_width)
                    .hint_text("Type a message... (Enter to send, Shift+Enter for newline)"),
            );

            ui.vertical(|ui| {
                if session.streaming {
                    if ui.button("Stop").clicked() {
                        chat.cancel(session);
                    }
                    ui.spinner();
                    return;
                }

                let can_send = !model.is_empty() && !self.input.trim().is_empty();
                let clicked = ui.add_enabled(can_send, egui::Button::new("Send")).clicked();
                if clicked || enter {
                    self.send(session, chat, model, config);
                }
            });
        });
    }

    fn send(&mut self, session: &mut ChatSession, chat: &mut ChatService, model: &str, config: &AppConfig) {
        if chat.send_message(session, model, &self.input, config) {
            self.input.clear();
        }
    }
}

fn render_bubble(ui: &mut egui::Ui, message: &Message, show_timestamps: bool, pending: bool) {
    let dark = ui.visuals().dark_mode;
    let fill = match (message.role, dark) {
        (Role::User, true) => egui::Color32::from_rgb(38, 70, 110),
        (Role::User, false) => egui::Color32::from_rgb(215, 232, 250),
        (Role::Assistant, true) => egui::Color32::from_rgb(48, 48, 52),
        (Role::Assistant, false) => egui::Color32::from_rgb(238, 238, 240),
        (Role::System, true) => egui::Color32::from_rgb(70, 60, 30),
        (Role::System, false) => egui::Color32::from_rgb(250, 240, 210),
    };

    let layout = match message.role {
        Role::User => egui::Layout::top_down(egui::Align::Max),
        _ => egui::Layout::top_down(egui::Align::Min),
    };

    ui.with_layout(layout, |ui| {
        egui::Frame::none()
            .fill(fill)
            .rounding(8.0)
            .inner_margin(egui::Margin::symmetric(10.0, 6.0))
            .show(ui, |ui| {
                ui.set_max_width(ui.available_width() * 0.8);

                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(message.role.label()).strong());
                    if !message.model.is_empty() {
                        ui.label(egui::RichText::new(&message.model).small().weak());
                    }
                    if show_timestamps {
                        ui.label(egui::RichText::new(format_timestamp(&message.timestamp)).small().weak());
                    }
                });

                if pending && message.content.is_empty() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(egui::RichText::new("Thinking...").italics().weak());
                    });
                } else {
                    ui.label(&message.content);
                }
            });
    });
}
