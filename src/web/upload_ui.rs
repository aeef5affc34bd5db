use crate::web::templates::escape_html;

/// CSS for the receipt drop zone and preview.
pub const UPLOAD_WIDGET_STYLES: &str = r#"
.rc-upload-widget { display: flex; flex-direction: column; gap: 0.75rem; }
.rc-upload-dropzone { border: 2px dashed #cbd5f5; border-radius: 12px; padding: 2rem; text-align: center; background: #f8fafc; color: #475569; transition: border-color 0.2s ease, background 0.2s ease; cursor: pointer; }
.rc-upload-dropzone strong { color: #1d4ed8; }
.rc-upload-dropzone[data-state="dragover"] { border-color: #2563eb; background: #e0f2fe; }
.rc-upload-note { color: #475569; font-size: 0.9rem; margin: 0.5rem 0 0; }
.rc-upload-input { display: none; }
.rc-upload-status { min-height: 1.5rem; font-size: 0.95rem; color: #2563eb; }
.rc-upload-status.error { color: #b91c1c; }
.rc-upload-preview { max-width: 100%; max-height: 320px; border-radius: 8px; border: 1px solid #e2e8f0; display: none; margin: 0 auto; }
.rc-upload-preview[data-visible="true"] { display: block; }
"#;

/// Vanilla script: picker, drag-drop and clipboard paste all funnel into one
/// upload to the workspace image endpoint. The server owns validation.
pub const UPLOAD_WIDGET_SCRIPT: &str = r#"<script>
(function() {
    function initWidget(widget) {
        if (widget.dataset.initialized === 'true') {
            return;
        }
        widget.dataset.initialized = 'true';

        const input = widget.querySelector('input[type="file"]');
        const dropzone = widget.querySelector('[data-dropzone]');
        const statusBox = widget.querySelector('[data-upload-status]');
        const preview = widget.querySelector('[data-upload-preview]');
        const endpoint = widget.dataset.endpoint;
        const fieldName = widget.dataset.field;
        let sequence = 0;

        function setStatus(text, isError) {
            statusBox.textContent = text;
            statusBox.classList.toggle('error', Boolean(isError));
        }

        function announce(detail) {
            widget.dispatchEvent(new CustomEvent('receipt:image', { bubbles: true, detail }));
        }

        async function send(file) {
            if (!file) {
                return;
            }
            const ticket = ++sequence;
            setStatus('Checking image…', false);
            const form = new FormData();
            form.append(fieldName, file, file.name || 'pasted-receipt.png');

            try {
                const response = await fetch(endpoint, { method: 'POST', body: form });
                const payload = await response.json().catch(() => ({}));
                if (ticket !== sequence) {
                    return;
                }
                if (!response.ok) {
                    preview.removeAttribute('src');
                    preview.dataset.visible = 'false';
                    setStatus(payload.message || 'The image could not be accepted.', true);
                    announce({ accepted: false, kind: payload.kind || null, message: payload.message || null });
                    return;
                }
                preview.src = payload.preview_url;
                preview.dataset.visible = 'true';
                setStatus(`${payload.file_name} · ${payload.width}×${payload.height} px`, false);
                announce({ accepted: true });
            } catch (err) {
                if (ticket === sequence) {
                    setStatus('Upload failed. Please check your connection.', true);
                    announce({ accepted: false, kind: 'network', message: null });
                }
            }
        }

        input.addEventListener('change', () => {
            send(input.files[0]);
            input.value = '';
        });

        const activateDrag = () => dropzone.dataset.state = 'dragover';
        const deactivateDrag = () => delete dropzone.dataset.state;

        dropzone.addEventListener('click', () => input.click());
        dropzone.addEventListener('dragenter', (event) => {
            event.preventDefault();
            activateDrag();
        });
        dropzone.addEventListener('dragover', (event) => {
            event.preventDefault();
        });
        dropzone.addEventListener('dragleave', (event) => {
            event.preventDefault();
            if (!dropzone.contains(event.relatedTarget)) {
                deactivateDrag();
            }
        });
        dropzone.addEventListener('drop', (event) => {
            event.preventDefault();
            deactivateDrag();
            send(event.dataTransfer.files[0]);
        });

        document.addEventListener('paste', (event) => {
            const items = Array.from((event.clipboardData || {}).items || []);
            const imageItem = items.find(item => item.kind === 'file' && item.type.startsWith('image/'));
            if (imageItem) {
                event.preventDefault();
                send(imageItem.getAsFile());
            }
        });
    }

    if (document.readyState === 'loading') {
        document.addEventListener('DOMContentLoaded', () => {
            document.querySelectorAll('.rc-upload-widget').forEach(initWidget);
        });
    } else {
        document.querySelectorAll('.rc-upload-widget').forEach(initWidget);
    }
})();
</script>"#;

/// Declarative configuration for rendering the upload widget snippet.
#[derive(Debug, Clone)]
pub struct UploadWidgetConfig<'a> {
    pub widget_id: &'a str,
    pub input_id: &'a str,
    pub field_name: &'a str,
    pub endpoint: &'a str,
    pub label: &'a str,
    pub note: Option<&'a str>,
    pub accept: Option<&'a str>,
}

impl<'a> UploadWidgetConfig<'a> {
    pub fn new(
        widget_id: &'a str,
        input_id: &'a str,
        field_name: &'a str,
        endpoint: &'a str,
        label: &'a str,
    ) -> Self {
        Self {
            widget_id,
            input_id,
            field_name,
            endpoint,
            label,
            note: None,
            accept: None,
        }
    }

    pub fn with_note(mut self, text: &'a str) -> Self {
        self.note = Some(text);
        self
    }

    pub fn with_accept(mut self, accept: &'a str) -> Self {
        self.accept = Some(accept);
        self
    }
}

pub fn render_upload_widget(config: &UploadWidgetConfig<'_>) -> String {
    let note = config
        .note
        .map(|text| format!("<p class=\"rc-upload-note\">{}</p>", escape_html(text)))
        .unwrap_or_default();

    let accept_attr = config
        .accept
        .map(|value| format!(" accept=\"{}\"", escape_html(value)))
        .unwrap_or_default();

    format!(
        r#"<div class="rc-upload-widget" id="{id}" data-endpoint="{endpoint}" data-field="{field_name}">
    <label for="{input_id}">{label}</label>
    <div class="rc-upload-dropzone" data-dropzone>
        <p><strong>Drop a receipt photo</strong> here, click to browse, or paste an image.</p>
        {note}
        <input class="rc-upload-input" id="{input_id}" name="{field_name}" type="file"{accept_attr}>
    </div>
    <div class="rc-upload-status" data-upload-status></div>
    <img class="rc-upload-preview" data-upload-preview alt="Receipt preview">
</div>"#,
        id = escape_html(config.widget_id),
        endpoint = escape_html(config.endpoint),
        input_id = escape_html(config.input_id),
        label = escape_html(config.label),
        note = note,
        field_name = escape_html(config.field_name),
        accept_attr = accept_attr,
    )
}
