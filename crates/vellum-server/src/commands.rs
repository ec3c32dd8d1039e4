use vellum_wire::CommandCode;

/// Operations a client can request. The discriminant is the wire code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum Command {
    Ping = 0,
    ClearColor = 1,
    SetXform = 2,
    DrawDots = 3,
    DrawArcs = 4,
    DrawVertices = 5,
    CreateTexture = 6,
    DrawTexture = 7,
    ReadTexture = 8,
    SetRenderTarget = 9,
    Flush = 10,
    FrameGrab = 11,
    DeleteTexture = 12,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Command::Ping,
        Command::ClearColor,
        Command::SetXform,
        Command::DrawDots,
        Command::DrawArcs,
        Command::DrawVertices,
        Command::CreateTexture,
        Command::DrawTexture,
        Command::ReadTexture,
        Command::SetRenderTarget,
        Command::Flush,
        Command::FrameGrab,
        Command::DeleteTexture,
    ];

    pub fn from_code(code: CommandCode) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn code(self) -> CommandCode {
        CommandCode(self as u16)
    }
}
