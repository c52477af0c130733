//! The CodeMirror editor themes mongo-express ships with.
//!
//! `ME_CONFIG_OPTIONS_EDITORTHEME` is passed straight into the web UI, so an unknown theme
//! only shows up as a broken stylesheet in the browser. Membership is checked up front instead.

/// A valid value for the `editor-theme` config option.
///
/// Parsing is an exact, case sensitive match on the theme identifier.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum EditorTheme {
    #[default]
    Default,
    #[strum(serialize = "3024-day")]
    Day3024,
    #[strum(serialize = "3024-night")]
    Night3024,
    Abbott,
    Abcdef,
    Ambiance,
    AmbianceMobile,
    AyuDark,
    AyuMirage,
    #[strum(serialize = "base16-dark")]
    Base16Dark,
    #[strum(serialize = "base16-light")]
    Base16Light,
    Bespin,
    Blackboard,
    Cobalt,
    Colorforth,
    Darcula,
    Dracula,
    DuotoneDark,
    DuotoneLight,
    Eclipse,
    Elegant,
    ErlangDark,
    GruvboxDark,
    Hopscotch,
    Icecoder,
    Idea,
    Isotope,
    Juejin,
    LesserDark,
    Liquibyte,
    Lucario,
    Material,
    MaterialDarker,
    MaterialOcean,
    MaterialPalenight,
    Mbo,
    MdnLike,
    Midnight,
    Monokai,
    Moxer,
    Neat,
    Neo,
    Night,
    Nord,
    OceanicNext,
    PandaSyntax,
    ParaisoDark,
    ParaisoLight,
    PastelOnDark,
    Railscasts,
    Rubyblue,
    Seti,
    Shadowfox,
    Solarized,
    Ssms,
    TheMatrix,
    TomorrowNightBright,
    TomorrowNightEighties,
    Ttcn,
    Twilight,
    VibrantInk,
    XqDark,
    XqLight,
    Yeti,
    Yonce,
    Zenburn,
}
